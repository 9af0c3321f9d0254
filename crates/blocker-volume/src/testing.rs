//! In-memory collaborators for unit tests

use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use blocker_client::error::DEVICE_IN_USE_CODE;
use blocker_client::{BlockStorageClient, ClientError, ClientResult};
use blocker_common::{AttachmentState, VolumeAttachment, VolumeDescription, VolumeState};
use parking_lot::Mutex;

use crate::host::{CommandOutput, CommandRunner, DeviceProbe};

/// A recorded storage API call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Describe(String),
    Attach { volume_id: String, device: String },
    Detach(String),
}

/// Which local node shows up after a successful attach
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Appearance {
    Legacy,
    Remapped,
    Never,
}

/// Device namespace held in memory
#[derive(Debug, Default)]
pub struct FakeDevices {
    nodes: Mutex<HashSet<PathBuf>>,
}

impl FakeDevices {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn occupy(&self, path: impl Into<PathBuf>) {
        self.nodes.lock().insert(path.into());
    }

    pub fn remove(&self, path: impl AsRef<Path>) {
        self.nodes.lock().remove(path.as_ref());
    }
}

impl DeviceProbe for FakeDevices {
    fn exists(&self, path: &Path) -> bool {
        self.nodes.lock().contains(path)
    }
}

/// Storage service whose transitions complete immediately
pub struct FakeStorage {
    volumes: Mutex<HashMap<String, VolumeDescription>>,
    script: Mutex<VecDeque<ClientResult<VolumeDescription>>>,
    calls: Mutex<Vec<Call>>,
    in_use: Mutex<HashSet<String>>,
    attach_error: Mutex<Option<ClientError>>,
    detach_error: Mutex<Option<ClientError>>,
    devices: Option<(Arc<FakeDevices>, Appearance)>,
}

impl FakeStorage {
    pub fn new() -> Self {
        Self {
            volumes: Mutex::new(HashMap::new()),
            script: Mutex::new(VecDeque::new()),
            calls: Mutex::new(Vec::new()),
            in_use: Mutex::new(HashSet::new()),
            attach_error: Mutex::new(None),
            detach_error: Mutex::new(None),
            devices: None,
        }
    }

    /// Make device nodes appear in `devices` on attach
    pub fn with_devices(mut self, devices: Arc<FakeDevices>, appearance: Appearance) -> Self {
        self.devices = Some((devices, appearance));
        self
    }

    /// Queue a describe response ahead of the simulated state
    pub fn script_describe(&self, response: ClientResult<VolumeDescription>) {
        self.script.lock().push_back(response);
    }

    /// Reject attach requests for `device` as already in use
    pub fn reject_device(&self, device: &str) {
        self.in_use.lock().insert(device.to_string());
    }

    pub fn fail_attach(&self, err: ClientError) {
        *self.attach_error.lock() = Some(err);
    }

    pub fn fail_detach(&self, err: Option<ClientError>) {
        *self.detach_error.lock() = err;
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
        self.calls.lock().iter().filter(|c| pred(c)).count()
    }

    pub fn attached_devices(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|c| match c {
                Call::Attach { device, .. } => Some(device.clone()),
                _ => None,
            })
            .collect()
    }

    pub fn state(&self, volume_id: &str) -> VolumeState {
        self.volumes
            .lock()
            .get(volume_id)
            .map_or(VolumeState::Available, |v| v.state)
    }

    fn remapped(device: &str) -> String {
        device.replacen("/dev/sd", "/dev/xvd", 1)
    }
}

#[async_trait]
impl BlockStorageClient for FakeStorage {
    async fn describe_volume(&self, volume_id: &str) -> ClientResult<VolumeDescription> {
        self.calls.lock().push(Call::Describe(volume_id.to_string()));
        if let Some(response) = self.script.lock().pop_front() {
            return response;
        }
        Ok(self
            .volumes
            .lock()
            .get(volume_id)
            .cloned()
            .unwrap_or_else(|| VolumeDescription::new(volume_id, VolumeState::Available)))
    }

    async fn attach_volume(
        &self,
        volume_id: &str,
        device: &str,
        instance_id: &str,
    ) -> ClientResult<()> {
        self.calls.lock().push(Call::Attach {
            volume_id: volume_id.to_string(),
            device: device.to_string(),
        });
        if self.in_use.lock().contains(device) {
            return Err(ClientError::api(
                DEVICE_IN_USE_CODE,
                format!("device {device} is already in use"),
            ));
        }
        if let Some(err) = self.attach_error.lock().clone() {
            return Err(err);
        }

        let attachment = VolumeAttachment {
            state: AttachmentState::Attached,
            device: Some(device.to_string()),
            instance_id: Some(instance_id.to_string()),
        };
        self.volumes.lock().insert(
            volume_id.to_string(),
            VolumeDescription::new(volume_id, VolumeState::InUse).with_attachment(attachment),
        );

        if let Some((devices, appearance)) = &self.devices {
            match appearance {
                Appearance::Legacy => devices.occupy(device),
                Appearance::Remapped => devices.occupy(Self::remapped(device)),
                Appearance::Never => {}
            }
        }
        Ok(())
    }

    async fn detach_volume(&self, volume_id: &str, _instance_id: &str) -> ClientResult<()> {
        self.calls.lock().push(Call::Detach(volume_id.to_string()));
        if let Some(err) = self.detach_error.lock().clone() {
            return Err(err);
        }

        let previous = self.volumes.lock().insert(
            volume_id.to_string(),
            VolumeDescription::new(volume_id, VolumeState::Available),
        );
        if let (Some(previous), Some((devices, _))) = (previous, &self.devices) {
            for device in previous.attachments.iter().filter_map(|a| a.device.as_deref()) {
                devices.remove(device);
                devices.remove(Self::remapped(device));
            }
        }
        Ok(())
    }
}

/// Command runner that records invocations
#[derive(Default)]
pub struct FakeRunner {
    commands: Mutex<Vec<Vec<String>>>,
    failures: Mutex<HashMap<String, CommandOutput>>,
}

impl FakeRunner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every run of `program` exit with `output`
    pub fn fail(&self, program: &str, output: CommandOutput) {
        self.failures.lock().insert(program.to_string(), output);
    }

    pub fn succeed(&self, program: &str) {
        self.failures.lock().remove(program);
    }

    pub fn commands(&self) -> Vec<Vec<String>> {
        self.commands.lock().clone()
    }

    pub fn runs_of(&self, program: &str) -> usize {
        self.commands
            .lock()
            .iter()
            .filter(|c| c.first().is_some_and(|p| p == program))
            .count()
    }
}

#[async_trait]
impl CommandRunner for FakeRunner {
    async fn run(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        let mut command = vec![program.to_string()];
        command.extend(args.iter().map(ToString::to_string));
        self.commands.lock().push(command);

        Ok(self
            .failures
            .lock()
            .get(program)
            .cloned()
            .unwrap_or_else(|| CommandOutput::ok("")))
    }
}
