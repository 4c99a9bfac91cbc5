pub mod donation;
pub mod post;
pub mod settings;
pub mod site_content;
pub mod testimonial;
pub mod user;
