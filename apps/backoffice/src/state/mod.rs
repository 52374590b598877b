//! # State Module
//!
//! Application state for the back office.
//!
//! Each command takes only the state it needs; [`crate::AppContext`] owns
//! one of each and is built once at startup.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    State Architecture                                   │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                      AppContext                                 │   │
//! │  │  built by AppContext::open(config) at startup                   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                              │                                          │
//! │          ┌──────────────────┼──────────────────┐                       │
//! │          ▼                  ▼                  ▼                        │
//! │  ┌──────────────┐  ┌──────────────┐  ┌──────────────────┐              │
//! │  │   DbState    │  │  CartState   │  │   ConfigState    │              │
//! │  │              │  │              │  │                  │              │
//! │  │  Database +  │  │  Arc<Mutex<  │  │  Arc<RwLock<     │              │
//! │  │  TenantId    │  │    Cart      │  │    AppSettings   │              │
//! │  │              │  │  >>          │  │  >> + file path  │              │
//! │  └──────────────┘  └──────────────┘  └──────────────────┘              │
//! │                                                                         │
//! │  THREAD SAFETY:                                                        │
//! │  • DbState: Database has internal connection pool (thread-safe)        │
//! │  • CartState: Protected by Arc<Mutex<T>> for exclusive access          │
//! │  • ConfigState: RwLock, written only through ConfigState::update       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

mod cart;
mod config;
mod db;

pub use cart::{Cart, CartError, CartItem, CartState, CartTotals};
pub use config::{
    AppSettings, ConfigError, ConfigState, CurrencySettings, DatabaseSettings, DebtSettings,
    StoreSettings,
};
pub use db::DbState;
