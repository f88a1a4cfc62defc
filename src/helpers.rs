use std::fmt;

pub enum Status {
    Subscribed,
    Recorded,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Status::Subscribed => write!(f, "Subscription added successfully"),
            Status::Recorded => write!(f, "Page visit recorded"),
        }
    }
}

impl From<Status> for String {
    fn from(value: Status) -> Self {
        match value {
            Status::Subscribed => {
                String::from("Subscription added successfully")
            },
            Status::Recorded => String::from("Page visit recorded"),
        }
    }
}
