//! Priority-ordered credential decoration for outgoing HTTP requests.
//!
//! A [`DecoratorChain`] tries static Basic credentials and OAuth 2.0 client-credentials bearer
//! tokens in descending priority order. Tokens are shortened by a [`SafetyMargin`] and reused by a
//! single-flight [`ReusingTokenCache`]; every fetch and decoration is reported on an [`EventBus`].

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod cache;
pub mod config;
pub mod decorate;
pub mod error;
pub mod events;
pub mod exchange;
pub mod http;
pub mod obs;
pub mod source;
pub mod token;

pub use cache::ReusingTokenCache;
pub use config::{AuthStyle, BasicConfig, Config, OAuthConfig};
pub use decorate::{BasicDecorator, DecoratorChain, OAuthDecorator, RequestHeaders, Strategy};
pub use error::{ConfigError, DecorationError, Error, FetchError, Result, StrategyFailure};
pub use events::{
	CredentialKind, DecorateEvent, DecorateListener, EventBus, FetchEvent, FetchListener, Publish,
	Registration,
};
pub use source::{SafetyMargin, SafetyMarginSource, TokenSource};
pub use token::{Token, TokenSecret};

mod _prelude {
	pub use std::{
		collections::BTreeMap,
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		pin::Pin,
		str::FromStr,
		sync::Arc,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};

	pub use crate::error::{Error, Result};
}

pub use oauth2;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
