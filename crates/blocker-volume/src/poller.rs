//! Bounded-retry waits for asynchronous remote state transitions
//!
//! Attach and detach only start a transition on the storage service. The
//! poller describes the volume until a predicate holds, sleeping a fixed
//! interval between attempts. Describe failures end the wait immediately.

use std::sync::Arc;
use std::time::Duration;

use blocker_client::BlockStorageClient;
use blocker_common::config::PollConfig;
use blocker_common::{AttachmentState, VolumeDescription, VolumeState};
use tracing::debug;

use crate::error::{VolumeError, VolumeResult};

/// Fixed retry budget for a single wait
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Describe calls before giving up (at least 1)
    pub max_attempts: u32,
    /// Sleep between describe calls
    pub interval: Duration,
}

impl PollPolicy {
    /// Create a policy
    #[must_use]
    pub fn new(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            interval,
        }
    }
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self::new(12, Duration::from_secs(5))
    }
}

impl From<&PollConfig> for PollPolicy {
    fn from(config: &PollConfig) -> Self {
        Self::new(config.max_attempts, config.interval())
    }
}

/// Predicate over a described volume; `Err` carries why it does not hold yet
pub type StateCheck = fn(&VolumeDescription) -> Result<(), String>;

/// Exactly one attachment record exists and it is attached
pub fn attached(volume: &VolumeDescription) -> Result<(), String> {
    match volume.attachments.as_slice() {
        [attachment] if attachment.state == AttachmentState::Attached => Ok(()),
        [attachment] => Err(format!(
            "seeking {}, current is {}",
            AttachmentState::Attached,
            attachment.state
        )),
        attachments => Err(format!(
            "expected 1 attachment, got {}",
            attachments.len()
        )),
    }
}

/// Volume is available (not attached anywhere)
pub fn available(volume: &VolumeDescription) -> Result<(), String> {
    if volume.state == VolumeState::Available {
        Ok(())
    } else {
        Err(format!(
            "seeking {}, current is {}",
            VolumeState::Available,
            volume.state
        ))
    }
}

/// Waits on remote volume state
#[derive(Clone)]
pub struct StatePoller {
    client: Arc<dyn BlockStorageClient>,
    policy: PollPolicy,
}

impl StatePoller {
    /// Create a poller
    pub fn new(client: Arc<dyn BlockStorageClient>, policy: PollPolicy) -> Self {
        Self { client, policy }
    }

    /// Describe `volume_id` until `check` holds or the budget runs out.
    ///
    /// On success returns as soon as the predicate holds, without sleeping
    /// again. On exhaustion returns the predicate's last reason as
    /// [`VolumeError::StateTransitionTimeout`].
    pub async fn wait_until(&self, volume_id: &str, check: StateCheck) -> VolumeResult<()> {
        let mut attempt = 0;
        loop {
            attempt += 1;

            let volume = self.client.describe_volume(volume_id).await?;
            let reason = match check(&volume) {
                Ok(()) => return Ok(()),
                Err(reason) => reason,
            };

            if attempt >= self.policy.max_attempts {
                return Err(VolumeError::StateTransitionTimeout {
                    volume_id: volume_id.to_string(),
                    attempts: attempt,
                    reason,
                });
            }

            debug!(
                volume_id,
                attempt,
                %reason,
                "waiting for volume state transition"
            );
            tokio::time::sleep(self.policy.interval).await;
        }
    }

    /// Wait until the volume has exactly one attached attachment
    pub async fn wait_until_attached(&self, volume_id: &str) -> VolumeResult<()> {
        self.wait_until(volume_id, attached).await
    }

    /// Wait until the volume is available
    pub async fn wait_until_available(&self, volume_id: &str) -> VolumeResult<()> {
        self.wait_until(volume_id, available).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Call, FakeStorage};
    use blocker_client::ClientError;
    use blocker_common::VolumeAttachment;
    use tokio::time::Instant;

    fn attaching() -> VolumeDescription {
        VolumeDescription::new("vol-1", VolumeState::InUse)
            .with_attachment(VolumeAttachment::new(AttachmentState::Attaching))
    }

    fn attached_desc() -> VolumeDescription {
        VolumeDescription::new("vol-1", VolumeState::InUse)
            .with_attachment(VolumeAttachment::new(AttachmentState::Attached))
    }

    /// Paused clock advanced by exactly `n` default intervals (ms rounding aside)
    fn assert_sleeps(start: Instant, n: u32) {
        let elapsed = start.elapsed();
        let expected = Duration::from_secs(5) * n;
        assert!(
            elapsed >= expected && elapsed < expected + Duration::from_secs(1),
            "expected {n} sleeps, clock advanced {elapsed:?}"
        );
    }

    fn poller(storage: &Arc<FakeStorage>) -> StatePoller {
        StatePoller::new(storage.clone(), PollPolicy::default())
    }

    #[test]
    fn test_attached_predicate() {
        assert!(attached(&attached_desc()).is_ok());

        let reason = attached(&attaching()).unwrap_err();
        assert_eq!(reason, "seeking attached, current is attaching");

        let none = VolumeDescription::new("vol-1", VolumeState::Available);
        assert_eq!(attached(&none).unwrap_err(), "expected 1 attachment, got 0");

        let two = attached_desc().with_attachment(VolumeAttachment::new(AttachmentState::Attached));
        assert_eq!(attached(&two).unwrap_err(), "expected 1 attachment, got 2");
    }

    #[test]
    fn test_available_predicate() {
        assert!(available(&VolumeDescription::new("vol-1", VolumeState::Available)).is_ok());
        assert_eq!(
            available(&attached_desc()).unwrap_err(),
            "seeking available, current is in-use"
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_nth_fetch() {
        let storage = Arc::new(FakeStorage::new());
        for _ in 0..4 {
            storage.script_describe(Ok(attaching()));
        }
        storage.script_describe(Ok(attached_desc()));

        let start = Instant::now();
        poller(&storage).wait_until_attached("vol-1").await.unwrap();

        // 5 fetches, 4 sleeps
        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 5);
        assert_sleeps(start, 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_success_on_last_attempt() {
        let storage = Arc::new(FakeStorage::new());
        for _ in 0..11 {
            storage.script_describe(Ok(attaching()));
        }
        storage.script_describe(Ok(attached_desc()));

        let start = Instant::now();
        poller(&storage).wait_until_attached("vol-1").await.unwrap();

        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 12);
        assert_sleeps(start, 11);
    }

    #[tokio::test(start_paused = true)]
    async fn test_immediate_success_does_not_sleep() {
        let storage = Arc::new(FakeStorage::new());
        storage.script_describe(Ok(attached_desc()));

        let start = Instant::now();
        poller(&storage).wait_until_attached("vol-1").await.unwrap();
        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 1);
        assert_sleeps(start, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_after_budget() {
        let storage = Arc::new(FakeStorage::new());
        for _ in 0..20 {
            storage.script_describe(Ok(attaching()));
        }

        let start = Instant::now();
        let err = poller(&storage).wait_until_attached("vol-1").await.unwrap_err();

        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 12);
        assert_sleeps(start, 11);
        match err {
            VolumeError::StateTransitionTimeout {
                volume_id,
                attempts,
                reason,
            } => {
                assert_eq!(volume_id, "vol-1");
                assert_eq!(attempts, 12);
                assert_eq!(reason, "seeking attached, current is attaching");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_describe_error_is_not_retried() {
        let storage = Arc::new(FakeStorage::new());
        storage.script_describe(Ok(attaching()));
        storage.script_describe(Err(ClientError::transport("connection reset")));
        storage.script_describe(Ok(attached_desc()));

        let err = poller(&storage).wait_until_attached("vol-1").await.unwrap_err();
        assert!(matches!(err, VolumeError::Client(ClientError::Transport(_))));
        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_policy_from_config() {
        let config = PollConfig {
            max_attempts: 2,
            interval_secs: 1,
        };
        let storage = Arc::new(FakeStorage::new());
        for _ in 0..3 {
            storage.script_describe(Ok(attached_desc()));
        }

        let poller = StatePoller::new(storage.clone(), PollPolicy::from(&config));
        let err = poller.wait_until_available("vol-1").await.unwrap_err();
        assert!(matches!(err, VolumeError::StateTransitionTimeout { attempts: 2, .. }));
        assert_eq!(storage.count(|c| matches!(c, Call::Describe(_))), 2);
    }
}
