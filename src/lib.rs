pub mod config;
pub mod domain {
    pub mod event;
    pub mod payout;
}
pub mod error;
pub mod http {
    pub mod handlers {
        pub mod ops;
        pub mod payouts;
    }
    pub mod middleware {
        pub mod api_key;
    }
    pub mod routes;
}
pub mod providers;
pub mod repo {
    pub mod in_memory;
    pub mod payouts_repo;
    pub mod store;
}
pub mod service {
    pub mod payout_service;
    pub mod resolution_worker;
    pub mod webhook_dispatcher;
}

#[derive(Clone)]
pub struct AppState {
    pub payout_service: service::payout_service::PayoutService,
}
