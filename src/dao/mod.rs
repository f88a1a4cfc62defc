pub use file::{DataBase, SubscriptionStore, VisitLog};

mod file;
