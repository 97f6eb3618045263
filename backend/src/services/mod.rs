// Collaborator adapters used by the workflow engine

pub mod chat_gateway;
pub mod email;
pub mod entity_client;

pub use chat_gateway::ChatGatewayClient;
pub use email::{EmailDisabled, EmailService};
pub use entity_client::EntityServiceClient;
