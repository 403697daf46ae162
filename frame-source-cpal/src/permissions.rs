//! Microphone access check.
//!
//! Desktop hosts have no per-app consent query. Access is inferred by
//! probing the default input device: if it exists and will describe its
//! input configurations, capture is treated as permitted. A device that is
//! missing or reports itself unavailable (disabled by privacy settings,
//! sandbox, or held exclusively) counts as denied.

use cpal::traits::{DeviceTrait, HostTrait};

use frame_source_core::PermissionStatus;

/// Check if microphone access is available on `host`.
pub fn check_microphone_permission(host: &cpal::Host) -> PermissionStatus {
    let Some(device) = host.default_input_device() else {
        return PermissionStatus::Denied;
    };

    match device.supported_input_configs() {
        Ok(mut configs) => {
            if configs.next().is_some() {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            }
        }
        Err(cpal::SupportedStreamConfigsError::DeviceNotAvailable) => PermissionStatus::Denied,
        Err(e) => {
            // Other error: assume available but report
            log::warn!("Unexpected error checking mic permission: {}", e);
            PermissionStatus::Granted
        }
    }
}

/// Granted if any available host grants access.
pub fn check_any_host_permission() -> PermissionStatus {
    let granted = cpal::available_hosts()
        .into_iter()
        .filter_map(|id| cpal::host_from_id(id).ok())
        .any(|host| check_microphone_permission(&host).is_granted());

    if granted {
        PermissionStatus::Granted
    } else {
        PermissionStatus::Denied
    }
}
