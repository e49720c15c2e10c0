pub mod command;
pub mod config;
pub mod constants;
pub mod datagram;
pub mod device;
pub mod error;
pub mod packet;
pub mod receiver;
pub mod registry;
pub mod state;
pub mod transport;
pub mod values;


// Re-export the driver and the types its API takes and returns
pub use command::{Baud, Code, Command, Rate, Switch};
pub use config::DriverConfig;
pub use datagram::Datagram;
pub use device::MiniCt;
pub use error::{MiniCtError, Result};
pub use state::{DriverState, Mode};
pub use transport::{Connector, SerialConnector, Transport, available_ports};
pub use values::OutputFormat;
