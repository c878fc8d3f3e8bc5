/*!
 * Matching foreign subtitle text to source lines.
 *
 * - `tool`: optional timing correction of the foreign track by an external program
 * - `overlap`: interval-overlap lookup of foreign text for one source line
 */

pub use self::overlap::overlap_text;
pub use self::tool::{ExternalAligner, PassthroughSynchronizer, SubtitleSynchronizer};

pub mod overlap;
pub mod tool;
