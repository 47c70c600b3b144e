//! Headline scraping from configured news sources.
//!
//! Unlike a per-outlet scraper module for each source, everything here is
//! driven by the region catalog: each source entry carries its URL and an
//! ordered list of CSS selectors, so adding an outlet is a config change,
//! not a code change.
//!
//! # Pattern
//!
//! For each source:
//! 1. **Fetch**: download the front page with a browser User-Agent
//! 2. **Extract**: try the selectors in order; the first selector that
//!    yields stories wins
//! 3. **Filter**: keep plausible headline text, skip consent boilerplate,
//!    de-duplicate, cap the story count
//!
//! Failed sources are logged and skipped; the run continues with whatever
//! the remaining sources produced.

pub mod headlines;
