pub use self::{
    push::{
        BroadcastReport, Claims, DeliveryOutcome, Notification,
        NotificationPayload, PushHeader, Urgency,
    },
    subscription::{SubscribeRequest, SubscriptionData, SubscriptionKeys},
};

mod push;
mod subscription;
