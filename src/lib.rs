//! Kaoche - Subtitle QA Toolkit
//!
//! Library behind the `kaoche` command: subtitle codecs, bilingual file
//! parsing, timeline and LLM-assisted alignment, LLM-based localization
//! quality assessment (LQA), `.kcp` project files and a toolbox of subtitle
//! utilities.

pub mod align;
pub mod bilingual;
pub mod cli;
pub mod config;
pub mod error;
pub mod export;
pub mod history;
pub mod input;
pub mod llm;
pub mod lqa;
pub mod project;
pub mod prompts;
pub mod secrets;
pub mod subtitle;
pub mod toolbox;
