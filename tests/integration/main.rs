mod github_provider;
mod mocks;
mod organization;
