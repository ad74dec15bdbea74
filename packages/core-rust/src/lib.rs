//! Quest events core: operation identities, cancelable event args, listener
//! bindings, the listener registry and the event dispatcher.

pub mod dispatcher;
pub mod event;
pub mod listener;
pub mod operation;
pub mod registry;
pub mod types;

pub use dispatcher::EventDispatcher;
pub use event::CancelableEventArgs;
pub use listener::{
    ListenerError, ListenerFailurePolicy, ListenerPhase, PostBinding, PostListener, PreBinding,
    PreListener,
};
pub use operation::{OperationId, UnknownOperation};
pub use registry::ListenerRegistry;
pub use types::Value;
