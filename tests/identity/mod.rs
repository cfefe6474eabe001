mod symbol_files;
