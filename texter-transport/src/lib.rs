pub mod backends;
pub mod registry;

pub use self::{
    backends::{Deliveries, FileSettings, FileTransport, TestSettings, TestTransport},
    registry::{
        Constructor, DeliveryMethod, TransportRegistry, TransportType, merge_settings,
        typed_settings,
    },
};
