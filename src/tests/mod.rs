
mod test_contention;
mod test_memory_counter_store;
