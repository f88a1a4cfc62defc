pub use self::{subscription::Subscription, visit::Visit};

mod subscription;
mod visit;
