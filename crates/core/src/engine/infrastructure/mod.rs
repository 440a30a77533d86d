pub mod threaded_engine;
