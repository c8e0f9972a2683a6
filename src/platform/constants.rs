//! Evidence markers for platform and variant detection.

pub const WSL_ENV_MARKERS: &[&str] = &["WSL_DISTRO_NAME", "WSL_INTEROP"];
pub const PROC_VERSION: &str = "/proc/version";
pub const PROC_OSRELEASE: &str = "/proc/sys/kernel/osrelease";

pub const TERMUX_PREFIX: &str = "/data/data/com.termux/files/usr";
pub const TERMUX_HOME: &str = "/data/data/com.termux/files/home";
pub const TERMUX_VERSION_ENV: &str = "TERMUX_VERSION";

pub const ANDROID_ENV_MARKERS: &[&str] = &["ANDROID_ROOT", "ANDROID_DATA"];
pub const ANDROID_BUILD_PROP: &str = "/system/build.prop";

pub const ISH_APK_DIR: &str = "/etc/apk";
pub const ISH_PROC_DIR: &str = "/proc/ish";

/// Substrings of the interpreter path or `HOME` that identify app-hosted
/// interpreters on Android.
pub const MOBILE_IDE_MARKERS: &[&str] = &["pydroid", "ru.iiec.pydroid3", "org.qpython"];
pub const MOBILE_IDE_DATA_DIRS: &[&str] = &[
    "/data/data/ru.iiec.pydroid3",
    "/data/data/org.qpython.qpy",
    "/data/data/org.qpython.qpy3",
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn termux_markers_share_app_root() {
        let root = "/data/data/com.termux/files";
        assert!(TERMUX_PREFIX.starts_with(root));
        assert!(TERMUX_HOME.starts_with(root));
    }

    #[test]
    fn data_dirs_match_markers() {
        for dir in MOBILE_IDE_DATA_DIRS {
            assert!(MOBILE_IDE_MARKERS.iter().any(|m| dir.contains(m)), "{dir}");
        }
    }
}
