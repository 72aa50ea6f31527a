//! # Script Compiler
//!
//! Turns declarative script and shared-function definitions into executable
//! batch or shell code.
//!
//! ## Pipeline
//!
//! 1. **Data**: `ScriptData` / `FunctionData` come from collection YAML (`data`).
//! 2. **Functions**: shared functions are parsed and checked once per collection (`function`).
//! 3. **Calls**: a script's `call` is compiled through the adaptive call compiler.
//!    Functions with code compile inline; functions made of calls recurse with
//!    arguments re-derived from the caller (`call_compiler`).
//! 4. **Expressions**: `{{ $param | pipes }}` and `{{ with $param }} ... {{ end }}`
//!    are substituted by the expressions compiler (`expressions_compiler`, `parsers`, `pipes`).
//! 5. **Validation**: literal and compiled code are checked line by line (`validate`).
//!
//! ## Invariants
//!
//! - Argument collections never hold two values for one parameter.
//! - A required parameter never compiles to an empty value.
//! - A function never calls itself, directly or through other functions.
//! - Every failure carries its context chain, from the script name down to the cause.

pub mod bridge;
pub mod call;
pub mod call_compiler;
pub mod data;
pub mod error;
pub mod expression;
pub mod expressions_compiler;
pub mod function;
pub mod language;
pub mod options;
pub mod parsers;
pub mod pipes;
pub mod regex_builder;
pub mod script;
pub mod validate;

#[cfg(test)]
mod compile_tests;
#[cfg(test)]
mod validation_tests;

pub use call::{FunctionCall, FunctionCallArgument, FunctionCallArgumentCollection};
pub use call_compiler::{merge_code_parts, CompiledCode, FunctionCallCompiler, FunctionCallSequenceCompiler};
pub use data::{CollectionData, FunctionData, ScriptData};
pub use error::{CompileError, Result, ResultExt};
pub use expressions_compiler::{DefaultExpressionsCompiler, ExpressionsCompiler};
pub use function::{parse_shared_functions, SharedFunction, SharedFunctionCollection};
pub use language::ScriptLanguage;
pub use options::CompileOptions;
pub use pipes::{DefaultPipelineCompiler, Pipe, PipeFactory, PipelineCompiler};
pub use script::{CategoryCollectionContext, RecommendationLevel, Script, ScriptCode, ScriptCompiler};
pub use validate::{CodeValidationRule, CodeValidator};

#[cfg(feature = "napi")]
pub use bridge::compile_collection_native;
