pub use self::push::WebPush;

mod push;
