// Unit test modules

mod models {
    mod test_bsm_properties;
    mod test_model_consistency;
}

mod engine {
    mod test_monte_carlo;
}

mod concurrency {
    mod test_rng_pool;
}
