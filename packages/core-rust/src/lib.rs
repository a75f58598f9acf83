//! svcwire core: error envelope, connection parameters, schemas, command sets
//! and the counters/tracer interfaces shared by every transport.

pub mod commands;
pub mod connect;
pub mod context;
pub mod counters;
pub mod data;
pub mod errors;
pub mod schema;
pub mod trace;

pub use commands::{Command, CommandArgs, CommandFuture, CommandSet, Commandable};
pub use connect::{ConnectionParams, CredentialParams};
pub use context::ContextInfo;
pub use counters::{Counter, CounterTiming, CounterType, Counters, MemoryCounters, NullCounters};
pub use data::{DataPage, FilterParams, IdGenerator, PagingParams};
pub use errors::{ApplicationError, ErrorCategory, ErrorDescription};
pub use schema::{ObjectSchema, PropertySchema, PropertyType, TypeCode, ValidationResult};
pub use trace::{LogTracer, NullTracer, TraceTiming, Tracer};
