use std::fmt;
use std::str::FromStr;

use crate::error::BrokerError;

/// The fixed topic catalogue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Topic {
    /// Start trigger emitted by order intake.
    StartSaga,
    /// Inbound topic of the orchestrator; every participant outcome lands here.
    Orchestrator,
    FinishSuccess,
    FinishFail,
    ProductValidationSuccess,
    ProductValidationFail,
    PaymentSuccess,
    PaymentFail,
    InventorySuccess,
    InventoryFail,
    /// Terminal events for the completion notifier.
    NotifyEnding,
}

impl Topic {
    /// Every topic in the catalogue.
    pub const ALL: [Topic; 11] = [
        Topic::StartSaga,
        Topic::Orchestrator,
        Topic::FinishSuccess,
        Topic::FinishFail,
        Topic::ProductValidationSuccess,
        Topic::ProductValidationFail,
        Topic::PaymentSuccess,
        Topic::PaymentFail,
        Topic::InventorySuccess,
        Topic::InventoryFail,
        Topic::NotifyEnding,
    ];

    /// Returns the wire name of the topic.
    pub fn as_str(&self) -> &'static str {
        match self {
            Topic::StartSaga => "start-saga",
            Topic::Orchestrator => "orchestrator",
            Topic::FinishSuccess => "finish-success",
            Topic::FinishFail => "finish-fail",
            Topic::ProductValidationSuccess => "product-validation-success",
            Topic::ProductValidationFail => "product-validation-fail",
            Topic::PaymentSuccess => "payment-success",
            Topic::PaymentFail => "payment-fail",
            Topic::InventorySuccess => "inventory-success",
            Topic::InventoryFail => "inventory-fail",
            Topic::NotifyEnding => "notify-ending",
        }
    }

    /// Returns true for the two topics that end a saga.
    pub fn is_terminal(&self) -> bool {
        matches!(self, Topic::FinishSuccess | Topic::FinishFail)
    }
}

impl fmt::Display for Topic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Topic {
    type Err = BrokerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Topic::ALL
            .into_iter()
            .find(|topic| topic.as_str() == s)
            .ok_or_else(|| BrokerError::UnknownTopic(s.to_string()))
    }
}
