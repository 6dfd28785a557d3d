mod runtime_test;
