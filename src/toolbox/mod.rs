// Subtitle toolbox
//
// Standalone utilities that work on cue lists rather than projects:
// - engine: timeline edits (concat, shift, crop), bilingual split/merge,
//   punctuation regrouping, text filters, long-line fixes
// - cleanup: post-processing for machine transcripts (noise removal,
//   regrouping, gap and duration fixes, smart line breaks)
// - convert: format conversion for single files and directory trees
// - gradient: per-character ASS colour gradients
//
// All times are milliseconds on Cue.

pub mod cleanup;
pub mod convert;
pub mod engine;
pub mod gradient;

pub use cleanup::{CleanupOptions, clean_text, global_regroup_by_punctuation, process_segments, split_smartly};
pub use convert::{ConvertSummary, convert_dir, convert_file};
pub use engine::{
    TextFilter, batch_replace, concat, crop, filter_text, fix_long_sentences, merge_bilingual,
    regroup_by_punctuation, shift, split_bilingual, strip_timeline, txt_to_srt,
};
pub use gradient::apply_gradient;
