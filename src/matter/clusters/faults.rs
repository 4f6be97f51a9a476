//! Fault and boot-reason types reported through the diagnostics clusters.
//!
//! Fault sets are bounded per domain; the bound is the number of distinct
//! fault codes the domain defines.

use serde::{Deserialize, Serialize};
use strum::FromRepr;

/// Maximum number of simultaneously active hardware faults.
pub const MAX_HARDWARE_FAULTS: usize = 11;
/// Maximum number of simultaneously active radio faults.
pub const MAX_RADIO_FAULTS: usize = 7;
/// Maximum number of simultaneously active network faults.
pub const MAX_NETWORK_FAULTS: usize = 4;

/// Reason for the most recent boot.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, FromRepr, Serialize, Deserialize)]
#[repr(u8)]
pub enum BootReason {
    #[default]
    Unspecified = 0,
    PowerOnReboot = 1,
    BrownOutReset = 2,
    SoftwareWatchdogReset = 3,
    HardwareWatchdogReset = 4,
    SoftwareUpdateCompleted = 5,
    SoftwareReset = 6,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum HardwareFault {
    Unspecified = 0,
    Radio = 1,
    Sensor = 2,
    ResettableOverTemp = 3,
    NonResettableOverTemp = 4,
    PowerSource = 5,
    VisualDisplayFault = 6,
    AudioOutputFault = 7,
    UserInterfaceFault = 8,
    NonVolatileMemoryError = 9,
    TamperDetected = 10,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum RadioFault {
    Unspecified = 0,
    WiFiFault = 1,
    CellularFault = 2,
    ThreadFault = 3,
    NfcFault = 4,
    BleFault = 5,
    EthernetFault = 6,
}

#[derive(Clone, Copy, Debug, Eq, PartialEq, FromRepr)]
#[repr(u8)]
pub enum NetworkFault {
    Unspecified = 0,
    HardwareFailure = 1,
    NetworkJammed = 2,
    ConnectionFailed = 3,
}

/// A bounded set of currently active faults in one domain.
pub type FaultSet<T, const N: usize> = heapless::Vec<T, N>;

pub type HardwareFaults = FaultSet<HardwareFault, MAX_HARDWARE_FAULTS>;
pub type RadioFaults = FaultSet<RadioFault, MAX_RADIO_FAULTS>;
pub type NetworkFaults = FaultSet<NetworkFault, MAX_NETWORK_FAULTS>;

/// Add `fault` unless it is already active.
///
/// Returns whether the set changed; a full set hands the fault back.
pub fn insert<T: PartialEq, const N: usize>(set: &mut FaultSet<T, N>, fault: T) -> Result<bool, T> {
    if set.contains(&fault) {
        return Ok(false);
    }
    set.push(fault).map(|()| true)
}

/// `faults` with repeated codes removed, first occurrence kept.
pub fn distinct<T: PartialEq + Copy, const N: usize>(faults: &[T]) -> FaultSet<T, N> {
    let mut set = FaultSet::new();
    for fault in faults {
        // At most N distinct codes exist per domain
        let _ = insert(&mut set, *fault);
    }
    set
}

/// Fault codes present in `current` but not in `previous`.
pub fn added<T: PartialEq + Copy>(previous: &[T], current: &[T]) -> Vec<T> {
    current
        .iter()
        .filter(|f| !previous.contains(f))
        .copied()
        .collect()
}

/// Fault codes present in `previous` but no longer in `current`.
pub fn removed<T: PartialEq + Copy>(previous: &[T], current: &[T]) -> Vec<T> {
    added(current, previous)
}

/// Raw fault codes as carried in attribute values and event payloads.
pub fn codes<T: Copy + Into<u8>>(faults: &[T]) -> Vec<u8> {
    faults.iter().map(|f| (*f).into()).collect()
}

macro_rules! fault_code {
    ($($t:ty),*) => {
        $(
            impl From<$t> for u8 {
                fn from(fault: $t) -> u8 {
                    fault as u8
                }
            }
        )*
    };
}

fault_code!(HardwareFault, RadioFault, NetworkFault, BootReason);

/// A software fault reported by the application.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct SoftwareFault {
    /// Id of the faulting thread.
    pub id: u64,
    pub name: Option<String>,
    pub fault_recording: Vec<u8>,
}
