pub mod catalog;
pub mod config;
pub mod context;
pub mod delivery;
pub mod instrument;
pub mod job;
pub mod render;
pub mod rescue;
pub mod test_helper;
pub mod texter;

pub use self::{
    catalog::TexterCatalog,
    config::{ConfigError, DefaultOptions, TexterConfig},
    context::{ActionContext, TextOptions},
    delivery::{DeliveryOutcome, MessageDelivery},
    instrument::{Event, LogSubscriber, Notifications, Subscriber},
    job::{
        DeliverLaterOptions, DeliveryJob, DeliveryMethodName, EnqueuedJob, JobQueue,
        MemoryJobQueue, Schedule, perform_payload,
    },
    render::{Assigns, NoTemplates, RenderRequest, Renderer, StaticTemplates},
    rescue::RescuePipeline,
    test_helper::TestHarness,
    texter::{Action, DEFAULT_QUEUE_NAME, DefaultValue, TextDefaults, Texter, TexterBuilder},
};
