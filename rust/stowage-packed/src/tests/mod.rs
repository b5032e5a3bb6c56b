mod bulk_differential;
mod properties;
