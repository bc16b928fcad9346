pub mod google_news;
pub mod htwatch;
pub mod medicaltech;
pub mod prtimes_rss;
