use std::path::{Path, PathBuf};

pub fn get_from_env_or_path(env_key: &str, default_bin: &str) -> Option<PathBuf> {
    if let Ok(p) = std::env::var(env_key) {
        let pb = PathBuf::from(p);
        if pb.exists() {
            return Some(pb);
        }
    }
    get_from_path(default_bin)
}

pub fn get_from_path(bin: &str) -> Option<PathBuf> {
    if bin.contains(std::path::MAIN_SEPARATOR) {
        let p = PathBuf::from(bin);
        return if p.exists() { Some(p) } else { None };
    }
    let paths = std::env::var("PATH").ok()?;
    paths
        .split(if cfg!(windows) { ';' } else { ':' })
        .map(|dir| Path::new(dir).join(bin))
        .find(|candidate| candidate.exists())
}
