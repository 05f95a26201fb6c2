use proc_macro::TokenStream;
use quote::quote;
use syn::punctuated::Punctuated;
use syn::spanned::Spanned;
use syn::{
    Attribute, Data, DeriveInput, Fields, Index, Member, Result, Token, Type, parse_macro_input,
    parse_quote,
};

/// #[derive(Event)] 实现
pub(crate) fn expand(input: TokenStream) -> TokenStream {
    let input = parse_macro_input!(input as DeriveInput);
    match expand_input(&input) {
        Ok(out) => out.into(),
        Err(err) => err.to_compile_error().into(),
    }
}

fn expand_input(input: &DeriveInput) -> Result<proc_macro2::TokenStream> {
    let interfaces = parse_interfaces(&input.attrs)?;
    let parents = match &input.data {
        Data::Struct(data) => parent_members(&data.fields)?,
        Data::Enum(data) => {
            // 枚举不支持父类型，只能声明接口
            for variant in &data.variants {
                if let Some(field) = variant
                    .fields
                    .iter()
                    .find(|f| f.attrs.iter().any(|a| a.path().is_ident("event")))
                {
                    return Err(syn::Error::new(
                        field.span(),
                        "#[event(parent)] is only supported on struct fields",
                    ));
                }
            }
            Vec::new()
        }
        Data::Union(data) => {
            return Err(syn::Error::new(
                data.union_token.span(),
                "#[derive(Event)] does not support unions",
            ));
        }
    };

    let ident = &input.ident;
    let (impl_generics, ty_generics, where_clause) = input.generics.split_for_impl();

    if parents.is_empty() && interfaces.is_empty() {
        return Ok(quote! {
            impl #impl_generics ::eventbus::event::Event for #ident #ty_generics #where_clause {}
        });
    }

    Ok(quote! {
        impl #impl_generics ::eventbus::event::Event for #ident #ty_generics #where_clause {
            fn supertypes(types: &mut ::eventbus::resolver::Supertypes<Self>) {
                #( types.parent(|e| &e.#parents); )*
                #( types.interface::<#interfaces>(|e| e); )*
            }
        }
    })
}

// 收集标注了 #[event(parent)] 的字段
fn parent_members(fields: &Fields) -> Result<Vec<Member>> {
    let mut members = Vec::new();
    for (i, field) in fields.iter().enumerate() {
        let mut is_parent = false;
        for attr in field.attrs.iter().filter(|a| a.path().is_ident("event")) {
            attr.parse_nested_meta(|meta| {
                if meta.path.is_ident("parent") {
                    is_parent = true;
                    Ok(())
                } else {
                    Err(meta.error("unsupported field option, expected `parent`"))
                }
            })?;
        }
        if is_parent {
            members.push(match &field.ident {
                Some(ident) => Member::Named(ident.clone()),
                None => Member::Unnamed(Index::from(i)),
            });
        }
    }
    Ok(members)
}

// 解析类型级 #[event(implements(...))]
fn parse_interfaces(attrs: &[Attribute]) -> Result<Vec<Type>> {
    let mut interfaces = Vec::new();
    for attr in attrs.iter().filter(|a| a.path().is_ident("event")) {
        attr.parse_nested_meta(|meta| {
            if meta.path.is_ident("implements") {
                let content;
                syn::parenthesized!(content in meta.input);
                let list = Punctuated::<Type, Token![,]>::parse_terminated(&content)?;
                interfaces.extend(list.into_iter().map(as_trait_object));
                Ok(())
            } else {
                Err(meta.error("unsupported event option, expected `implements(...)`"))
            }
        })?;
    }
    Ok(interfaces)
}

// `Severity` 与 `dyn Severity` 等价
fn as_trait_object(ty: Type) -> Type {
    match ty {
        Type::Path(path) if path.qself.is_none() => parse_quote!(dyn #path),
        other => other,
    }
}
