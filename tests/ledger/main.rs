mod accumulator_test;
mod proof_test;
