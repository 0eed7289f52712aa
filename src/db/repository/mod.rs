pub mod option;
pub mod show;

pub use option::OptionRepository;
pub use show::ShowRepository;
