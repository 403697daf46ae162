use std::sync::Arc;

use cpal::traits::HostTrait;

use frame_source_core::{
    CaptureError, DeviceContext, PermissionStatus, PlatformServices, ServiceLookup,
};

use crate::audio_mode::ProcessAudioMode;
use crate::cpal_mic::CpalMicrophone;
use crate::permissions;

/// `DeviceContext` backed by the cpal hosts of this machine.
///
/// `ServiceLookup::Direct` uses the preferred host (or cpal's default host).
/// `ServiceLookup::Compat` scans every available host and takes the first one
/// with a default input device, for setups where the default host has none.
#[derive(Debug, Default, Clone, Copy)]
pub struct CpalContext {
    preferred: Option<cpal::HostId>,
}

impl CpalContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pin `Direct` lookups to a specific host.
    pub fn with_host(host_id: cpal::HostId) -> Self {
        Self {
            preferred: Some(host_id),
        }
    }

    fn direct_host(&self) -> cpal::HostId {
        self.preferred.unwrap_or_else(|| cpal::default_host().id())
    }

    fn compat_host(&self) -> Option<cpal::HostId> {
        cpal::available_hosts().into_iter().find(|id| {
            cpal::host_from_id(*id)
                .map(|host| host.default_input_device().is_some())
                .unwrap_or(false)
        })
    }
}

impl DeviceContext for CpalContext {
    fn microphone_permission(&self) -> PermissionStatus {
        match self.preferred.map(cpal::host_from_id) {
            Some(Ok(host)) => permissions::check_microphone_permission(&host),
            _ => permissions::check_any_host_permission(),
        }
    }

    fn services(&self, lookup: ServiceLookup) -> Result<PlatformServices, CaptureError> {
        let host_id = match lookup {
            ServiceLookup::Direct => self.direct_host(),
            ServiceLookup::Compat => self.compat_host().ok_or_else(|| {
                log::warn!("No cpal host exposes an input device");
                CaptureError::DeviceUnavailable
            })?,
        };
        log::debug!("Resolved audio services on host {} ({:?})", host_id.name(), lookup);

        Ok(PlatformServices {
            audio_mode: Arc::new(ProcessAudioMode),
            microphone: Arc::new(CpalMicrophone::new(host_id)),
            echo_canceler: None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn direct_lookup_honours_preferred_host() {
        let default_id = cpal::default_host().id();
        let context = CpalContext::with_host(default_id);

        let services = context.services(ServiceLookup::Direct).unwrap();
        assert!(services.echo_canceler.is_none());
    }

    #[test]
    fn default_context_has_no_preference() {
        assert!(CpalContext::new().preferred.is_none());
    }
}
