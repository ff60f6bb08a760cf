pub mod default_pipeline_factory;
