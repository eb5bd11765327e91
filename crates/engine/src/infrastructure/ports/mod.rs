//! Port traits for infrastructure boundaries.
//!
//! These are the ONLY abstractions in the engine. Everything else is concrete types.
//! Ports exist for:
//! - The message broker (could swap RabbitMQ -> in-process)
//! - Combat RPC and hero action dispatch (mocked in orchestrator tests)
//! - HTTP collaborators: hero, save, level design, items
//! - Clock (for testing)

mod broker;
mod error;
mod external;
mod testing;

pub use broker::{
    AckMode, BrokerChannel, BrokerConnection, BrokerPort, Delivery, DeliveryAcker,
    DeliveryStream, MessageProperties, OutboundMessage, QueueOptions,
};
pub use error::{BrokerError, CombatClientError, DispatchError, ServiceError};
pub use external::{
    CombatPort, HeroActionPort, HeroServicePort, ItemServicePort, LevelDesignPort,
    SaveServicePort,
};
pub use testing::ClockPort;

#[cfg(test)]
pub use broker::{MockBrokerChannel, MockBrokerConnection};
#[cfg(test)]
pub use external::{
    MockCombatPort, MockHeroActionPort, MockHeroServicePort, MockItemServicePort,
    MockLevelDesignPort, MockSaveServicePort,
};
#[cfg(test)]
pub use testing::MockClockPort;
