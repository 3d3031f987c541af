pub mod status_util;
