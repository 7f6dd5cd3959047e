pub mod handlers;

pub use handlers::{
    analyze_sitemap_file, derive_output_dir_name, expand_path, extract_url_path,
    resolve_output_dir,
};
