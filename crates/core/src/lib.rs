//! Core library for cpq-agent
//!
//! This crate implements the **Functional Core** of the cpq-agent application,
//! following the Functional Core - Imperative Shell architectural pattern.
//!
//! # Architecture Overview
//!
//! - **`cpq_agent_core`** (this crate): Pure transformation functions with zero I/O
//! - **`cpq-agent`**: Model calls, code execution, Salesforce HTTP and the
//!   interactive session (the Imperative Shell)
//!
//! All functions here are deterministic and tested with fixture data; nothing
//! in this crate talks to the network, spawns processes or touches the disk.
//!
//! # Module Organization
//!
//! - [`extract`]: Code block extraction from model responses
//! - [`conversation`]: Roles, messages and the round-robin group chat
//! - [`prompt`]: System messages and transcript rendering
//! - [`execution`]: Script naming and executor replies
//! - [`llm`]: Azure OpenAI chat-completions wire format
//! - [`salesforce`]: SOAP login and SOQL query transformations
//! - [`config`]: Secrets file model
//!
//! # Example Usage
//!
//! ```rust
//! use cpq_agent_core::extract::extract_python_code;
//!
//! let reply = "Here you go:\n```python\nprint(sf.query('SELECT Id FROM Product2'))\n```";
//! assert_eq!(
//!     extract_python_code(reply).as_deref(),
//!     Some("print(sf.query('SELECT Id FROM Product2'))")
//! );
//! assert_eq!(extract_python_code("no code"), None);
//! ```

pub mod config;
pub mod conversation;
pub mod execution;
pub mod extract;
pub mod llm;
pub mod prompt;
pub mod salesforce;
