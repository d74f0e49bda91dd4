pub mod bluetooth;
pub mod discovery;
pub mod simulated;
pub mod traits;

pub use bluetooth::BluetoothTransport;
pub use discovery::{BitDiscovery, DiscoveryConfig};
pub use simulated::{SimulatedConfig, SimulatedFailure, SimulatedTransport};
pub use traits::{
    BitCharacteristic, BitDevice, BitTransport, DisconnectCallback, GattServer, GattService,
};
