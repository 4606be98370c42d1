//! Per-module analysis.
//!
//! Everything here works on one module at a time and never looks at
//! another module's tree, so modules are analyzed in parallel.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌──────────────┐     ┌───────────────┐
//! │ Source modules  │────▶│ Syntax       │────▶│ ParsedModule  │
//! └─────────────────┘     │ providers    │     └───────────────┘
//!                         └──────────────┘             │
//!                                                      ▼
//!                         ┌──────────────┐     ┌───────────────┐
//!                         │ Plugin hooks │◀───▶│ Collector +   │
//!                         │ (member,     │     │ class analyzer│
//!                         │  class, mod) │     └───────────────┘
//!                         └──────────────┘             │
//!                                                      ▼
//!                                              ┌───────────────┐
//!                                              │ ModuleFacts   │
//!                                              │ (cached in    │
//!                                              │ AnalysisCtx)  │
//!                                              └───────────────┘
//! ```
//!
//! # Adding a New Syntax
//!
//! 1. Create a provider in `src/analysis/languages/`
//! 2. Implement the `SyntaxProvider` trait
//! 3. Register it in `languages/mod.rs`

pub mod class;
pub mod collector;
mod context;
pub mod facts;
pub mod jsdoc;
mod languages;
pub mod nodes;
mod traits;

pub use context::{AnalysisContext, AnalysisOutput, SourceInput};
pub use facts::{ModuleFacts, Span};
pub use languages::{
    get_provider, provider_for_path, register_providers, registered_extensions,
    JavaScriptProvider, TsxProvider, TypeScriptProvider,
};
pub use traits::{ParsedModule, SyntaxProvider};
