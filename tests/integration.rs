// Integration tests module

mod integration {
    mod alerts_test;
    mod cli_test;
    mod config_test;
    mod network_test;
    mod sampler_test;
    mod scheduler_test;
}
