use crate::error::HabitatError;

pub fn get_exit_code(error: &HabitatError) -> i32 {
    match error {
        HabitatError::UnknownCheck(_)
        | HabitatError::InvalidConfig(_)
        | HabitatError::ConfigError(_)
        | HabitatError::Config(_) => 2,

        HabitatError::PathNotFound(_) | HabitatError::NotAFile(_) => 3,

        HabitatError::PermissionDenied(_) => 13,

        HabitatError::Timeout(_) => 124,

        HabitatError::LaunchFailed { .. } => 127,

        _ => 1,
    }
}
