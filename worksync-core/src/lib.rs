mod credential;
mod descriptor;
mod store;

pub use credential::AccessToken;
pub use descriptor::RemoteFileDescriptor;
pub use store::{RemoteErrorClass, RemoteStore, RemoteStoreError};
