use alloc::{collections::BTreeMap, sync::Arc};

use config::device::DevId;
use mutex::SpinNoIrqLock;

use crate::{BlockDevice, CharDevice};

static BLOCK_DEVICES: SpinNoIrqLock<BTreeMap<DevId, Arc<dyn BlockDevice>>> =
    SpinNoIrqLock::new(BTreeMap::new());

static CHAR_DEVICES: SpinNoIrqLock<BTreeMap<DevId, Arc<dyn CharDevice>>> =
    SpinNoIrqLock::new(BTreeMap::new());

pub fn register_block_device(dev: Arc<dyn BlockDevice>) {
    let id = dev.dev_id();
    let old = BLOCK_DEVICES.lock().insert(id, dev);
    assert!(old.is_none(), "block device {id:#x} registered twice");
    log::info!("[register_block_device] dev {id:#x}");
}

pub fn lookup_block_device(id: DevId) -> Option<Arc<dyn BlockDevice>> {
    BLOCK_DEVICES.lock().get(&id).cloned()
}

pub fn register_char_device(dev: Arc<dyn CharDevice>) {
    let id = dev.dev_id();
    let old = CHAR_DEVICES.lock().insert(id, dev);
    assert!(old.is_none(), "char device {id:#x} registered twice");
    log::info!("[register_char_device] dev {id:#x}");
}

pub fn lookup_char_device(id: DevId) -> Option<Arc<dyn CharDevice>> {
    CHAR_DEVICES.lock().get(&id).cloned()
}
