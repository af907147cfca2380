pub fn build_id() -> String {
    let sha = option_env!("BUILD_GIT_SHA").unwrap_or("unknown");
    let tag = option_env!("BUILD_GIT_TAG").unwrap_or("unknown");
    format!("{sha} {tag}")
}

pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

pub fn build_date() -> &'static str {
    option_env!("BUILD_DATE").unwrap_or("unknown")
}
