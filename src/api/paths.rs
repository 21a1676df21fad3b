//! All Paths are recorded here for use throughout this codebase
pub mod base {
    pub const ROOT: &str = "/";
    pub const HEALTH: &str = "/health";
    pub const ABOUT: &str = "/about";
}

pub const EXPIRE_KEYS: &str = "/expire-keys";

/// Hits handed over by the local decision path
pub const HITS: &str = "/hits";

/// Cross-region endpoints
pub mod region {
    pub const HITS: &str = "/region/hits";
    pub const REMOTE_HITS: &str = "/region/hits/{name}/{unique_key}";
    pub const REGIONS: &str = "/regions";
}

pub fn remote_hits_path(name: &str, unique_key: &str) -> String {
    region::REMOTE_HITS
        .replace("{name}", name)
        .replace("{unique_key}", unique_key)
}
