pub mod account;
pub mod upstream;

pub use account::{Account, AccountKind, ModelMapping, PoolConfig, PoolStrategy};
pub use upstream::{CopilotTokenResponse, GithubUser, ModelEntry, ModelsResponse};
