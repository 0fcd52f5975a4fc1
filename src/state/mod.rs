mod event_bus;
mod token_store;

pub use event_bus::{EventBus, SessionEvent};
pub use token_store::{
    KeyringTokenStore, MemoryTokenStore, TokenStore, TokenStoreError, KEYRING_SERVICE,
};
